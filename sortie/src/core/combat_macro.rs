//! Literal combat macro text.
//!
//! A macro is an ordered list of statements. Rendering joins them with `;`
//! and terminates the script, so two macros built from the same statements
//! always render to the same text.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::{Item, Monster, Skill};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Macro {
    statements: Vec<String>,
}

impl Macro {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse literal macro text into statements.
    pub fn parse(text: &str) -> Self {
        let statements = text
            .split([';', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { statements }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn statement(mut self, statement: impl Into<String>) -> Self {
        let statement = statement.into();
        let trimmed = statement.trim().trim_end_matches(';').trim();
        if !trimmed.is_empty() {
            self.statements.push(trimmed.to_string());
        }
        self
    }

    /// Append every statement of `other`.
    pub fn step(mut self, other: &Macro) -> Self {
        self.statements.extend(other.statements.iter().cloned());
        self
    }

    pub fn item(self, item: &Item) -> Self {
        self.statement(format!("use {}", item))
    }

    pub fn skill(self, skill: &Skill) -> Self {
        self.statement(format!("skill {}", skill))
    }

    pub fn attack(self) -> Self {
        self.statement("attack")
    }

    pub fn repeat(self) -> Self {
        self.statement("repeat")
    }

    pub fn abort(self, reason: &str) -> Self {
        self.statement(format!("abort \"{}\"", reason.replace('"', "'")))
    }

    /// Wrap `body` in a conditional block guarded by `condition`.
    pub fn if_(self, condition: &str, body: &Macro) -> Self {
        if body.is_empty() {
            return self;
        }
        self.statement(format!("if {}", condition))
            .step(body)
            .statement("endif")
    }

    /// Condition matching a single monster.
    pub fn monster_condition(monster: &Monster) -> String {
        format!("monstername \"{}\"", monster.name().replace('"', "'"))
    }
}

impl From<String> for Macro {
    fn from(text: String) -> Self {
        Macro::parse(&text)
    }
}

impl From<Macro> for String {
    fn from(value: Macro) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write!(f, "{};", statement)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_statements_with_terminators() {
        let m = Macro::new()
            .skill(&Skill::new("Saucegeyser"))
            .item(&Item::new("seal tooth"))
            .attack()
            .repeat();
        assert_eq!(
            m.to_string(),
            "skill Saucegeyser;use seal tooth;attack;repeat;"
        );
    }

    #[test]
    fn empty_conditional_body_is_dropped() {
        let m = Macro::new().if_("monstername \"x\"", &Macro::new());
        assert!(m.is_empty());
        assert_eq!(m.to_string(), "");
    }

    #[test]
    fn parse_splits_literal_text() {
        let m = Macro::parse("attack; repeat;\nabort");
        assert_eq!(m.len(), 3);
        assert_eq!(m.to_string(), "attack;repeat;abort;");
    }

    #[test]
    fn conditional_wraps_body() {
        let body = Macro::new().attack();
        let m = Macro::new().if_(&Macro::monster_condition(&Monster::new("fluffy bunny")), &body);
        assert_eq!(
            m.to_string(),
            "if monstername \"fluffy bunny\";attack;endif;"
        );
    }
}
