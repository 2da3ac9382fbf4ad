//! Activity tables and the rows written into them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A time-partitioned activity table.
///
/// Every table carries an integer `time` column holding unix seconds; that is
/// the only column retention looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTable {
    Sign,
    Container,
    Item,
    Skull,
    Session,
    Chat,
    Command,
    Entity,
    Block,
}

impl ActivityTable {
    /// All tables, in the order a purge visits them.
    pub const ALL: [ActivityTable; 9] = [
        ActivityTable::Sign,
        ActivityTable::Container,
        ActivityTable::Item,
        ActivityTable::Skull,
        ActivityTable::Session,
        ActivityTable::Chat,
        ActivityTable::Command,
        ActivityTable::Entity,
        ActivityTable::Block,
    ];

    /// Unprefixed table name.
    pub fn name(self) -> &'static str {
        match self {
            ActivityTable::Sign => "sign",
            ActivityTable::Container => "container",
            ActivityTable::Item => "item",
            ActivityTable::Skull => "skull",
            ActivityTable::Session => "session",
            ActivityTable::Chat => "chat",
            ActivityTable::Command => "command",
            ActivityTable::Entity => "entity",
            ActivityTable::Block => "block",
        }
    }

    /// Physical table name under the given prefix.
    pub fn qualified_name(self, prefix: &str) -> String {
        format!("{prefix}{}", self.name())
    }

    /// Name as shown to operators (underscores become spaces).
    pub fn display_name(self) -> String {
        self.name().replace('_', " ")
    }
}

impl fmt::Display for ActivityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One ingested activity row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub table: ActivityTable,
    /// Unix seconds.
    pub time: i64,
    /// Who performed the action.
    pub actor: String,
    /// Free-form action payload.
    #[serde(default)]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purge_order() {
        let names: Vec<_> = ActivityTable::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            [
                "sign",
                "container",
                "item",
                "skull",
                "session",
                "chat",
                "command",
                "entity",
                "block"
            ]
        );
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(ActivityTable::Chat.qualified_name("co_"), "co_chat");
        assert_eq!(ActivityTable::Block.qualified_name(""), "block");
    }
}
