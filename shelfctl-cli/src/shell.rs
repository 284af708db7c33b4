//! Interactive menu over the table facade
//!
//! Loops until the user picks Exit or cancels the menu (Esc / Ctrl+C).
//! Every facade error is printed and the menu comes back; nothing here
//! aborts the session except a broken terminal.

use std::fmt;

use anyhow::{Context, Result};
use inquire::{InquireError, Select, Text};
use shelfctl_core::coerce::split_values;
use shelfctl_core::{TableAccess, TableError};

use crate::render::render_table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    View,
    Insert,
    Modify,
    Remove,
    Exit,
}

impl MenuChoice {
    const ALL: [MenuChoice; 5] = [
        MenuChoice::View,
        MenuChoice::Insert,
        MenuChoice::Modify,
        MenuChoice::Remove,
        MenuChoice::Exit,
    ];
}

impl fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuChoice::View => "View table",
            MenuChoice::Insert => "Insert record",
            MenuChoice::Modify => "Modify record",
            MenuChoice::Remove => "Remove record",
            MenuChoice::Exit => "Exit",
        };
        f.write_str(label)
    }
}

/// Answer to a single prompt; `None` when the user backed out
fn ask(message: &str, help: Option<&str>) -> Result<Option<String>> {
    let mut prompt = Text::new(message);
    if let Some(help) = help {
        prompt = prompt.with_help_message(help);
    }
    match prompt.prompt() {
        Ok(answer) => Ok(Some(answer)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(err) => Err(err).context("Failed to read input"),
    }
}

fn table_help(access: &TableAccess) -> String {
    let names: Vec<_> = access
        .registry()
        .all_schemas()
        .iter()
        .map(|schema| schema.name())
        .collect();
    format!("One of: {}", names.join(", "))
}

fn values_help(access: &TableAccess, table: &str) -> Option<String> {
    access
        .registry()
        .resolve(table)
        .ok()
        .map(|schema| format!("Columns: {}", schema.headers().join(", ")))
}

pub async fn run(access: &TableAccess) -> Result<()> {
    println!("shelfctl interactive shell ({} backend)", access.backend());

    loop {
        let choice = match Select::new("Menu options:", MenuChoice::ALL.to_vec()).prompt() {
            Ok(choice) => choice,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                return Ok(())
            }
            Err(err) => return Err(err).context("Failed to read menu choice"),
        };

        let outcome = match choice {
            MenuChoice::View => view(access).await?,
            MenuChoice::Insert => insert(access).await?,
            MenuChoice::Modify => modify(access).await?,
            MenuChoice::Remove => remove(access).await?,
            MenuChoice::Exit => return Ok(()),
        };

        if let Err(err) = outcome {
            println!("{err}");
        }
    }
}

type Step = std::result::Result<(), TableError>;

async fn view(access: &TableAccess) -> Result<Step> {
    let Some(table) = ask("Enter the table name:", Some(&table_help(access)))? else {
        return Ok(Ok(()));
    };
    Ok(access.list_table(table.trim()).await.map(|data| {
        print!("{}", render_table(&data));
    }))
}

async fn insert(access: &TableAccess) -> Result<Step> {
    let Some(table) = ask("Enter the table name:", Some(&table_help(access)))? else {
        return Ok(Ok(()));
    };
    let table = table.trim();
    let help = values_help(access, table);
    let Some(raw) = ask("Enter values (comma-separated):", help.as_deref())? else {
        return Ok(Ok(()));
    };

    let values = split_values(&raw);
    Ok(access
        .insert_record(table, &values)
        .await
        .map(|()| println!("Record inserted successfully.")))
}

async fn modify(access: &TableAccess) -> Result<Step> {
    let Some(table) = ask("Enter the table name:", Some(&table_help(access)))? else {
        return Ok(Ok(()));
    };
    let table = table.trim();
    let Some(id) = ask("Enter the ID of the record to modify:", None)? else {
        return Ok(Ok(()));
    };
    let help = values_help(access, table);
    let Some(raw) = ask("Enter new values (comma-separated):", help.as_deref())? else {
        return Ok(Ok(()));
    };

    let values = split_values(&raw);
    Ok(access
        .update_record(table, id.trim(), &values)
        .await
        .map(|()| println!("Record updated successfully.")))
}

async fn remove(access: &TableAccess) -> Result<Step> {
    let Some(table) = ask("Enter the table name:", Some(&table_help(access)))? else {
        return Ok(Ok(()));
    };
    let Some(id) = ask("Enter the ID of the record to delete:", None)? else {
        return Ok(Ok(()));
    };

    Ok(access
        .delete_record(table.trim(), id.trim())
        .await
        .map(|()| println!("Record deleted successfully.")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_lists_every_action_once() {
        let labels: Vec<_> = MenuChoice::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(
            labels,
            ["View table", "Insert record", "Modify record", "Remove record", "Exit"]
        );
    }
}
