/// What a remote command does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// `pg_dump` of the target database
    Dump {
        include_data: bool,
        excluded_schemas: Vec<String>,
    },
    /// Run SQL through psql in the target database
    ExecuteSql { single_transaction: bool },
    /// Run a query and return its single cell, unaligned
    FetchCell,
    /// Create the target database (runs outside of it)
    CreateDatabase,
    /// Drop the target database (runs outside of it)
    DropDatabase,
}

/// Typed description of one remote command plus its optional SQL payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub kind: CommandKind,
    pub sql: Option<String>,
}

impl CommandSpec {
    pub fn dump(include_data: bool, excluded_schemas: &[String]) -> Self {
        Self {
            kind: CommandKind::Dump {
                include_data,
                excluded_schemas: excluded_schemas.to_vec(),
            },
            sql: None,
        }
    }

    pub fn execute_sql(sql: impl Into<String>, single_transaction: bool) -> Self {
        Self {
            kind: CommandKind::ExecuteSql { single_transaction },
            sql: Some(sql.into()),
        }
    }

    pub fn fetch_cell(query: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::FetchCell,
            sql: Some(query.into()),
        }
    }

    pub fn create_database() -> Self {
        Self {
            kind: CommandKind::CreateDatabase,
            sql: None,
        }
    }

    pub fn drop_database() -> Self {
        Self {
            kind: CommandKind::DropDatabase,
            sql: None,
        }
    }

    /// Short form for logs, never includes the SQL payload
    pub fn describe(&self) -> String {
        match &self.kind {
            CommandKind::Dump { include_data, .. } if *include_data => "pg_dump".to_string(),
            CommandKind::Dump { .. } => "pg_dump -s".to_string(),
            CommandKind::ExecuteSql { .. } => {
                let len = self.sql.as_deref().map(str::len).unwrap_or(0);
                format!("psql #<{}_bytes", len)
            }
            CommandKind::FetchCell => format!("psql -c {:?}", self.sql.as_deref().unwrap_or("")),
            CommandKind::CreateDatabase => "CREATE DATABASE".to_string(),
            CommandKind::DropDatabase => "DROP DATABASE".to_string(),
        }
    }
}
