//! Inspect command - prints the category/item tree of a snapshot in display order.

use bookit::{
    FeatureConfig, Record, State,
    filter::ActiveFilters,
    reorder::{category_order, item_order},
};
use serde_json::json;

use crate::cli::InspectArgs;
use crate::output::{OutputFormat, cell, print_table};

/// One line of the printed tree
struct Row<'a> {
    parent: Option<i64>,
    record: &'a Record,
    hidden: bool,
}

fn tree<'a>(state: &'a State, config: &FeatureConfig, filters: &ActiveFilters) -> Vec<Row<'a>> {
    let mut rows = Vec::new();
    for category_id in category_order(state, config) {
        let Some(category) = state.record(&config.categories, category_id) else {
            continue;
        };
        let items: Vec<Row<'a>> = item_order(state, config, category_id)
            .into_iter()
            .filter_map(|id| state.record(&config.items, id))
            .map(|record| Row {
                parent: Some(category_id),
                record,
                hidden: !filters.is_visible(record, &config.filters),
            })
            .collect();
        let category_hidden =
            filters.is_active() && !items.is_empty() && items.iter().all(|row| row.hidden);
        rows.push(Row {
            parent: None,
            record: category,
            hidden: category_hidden,
        });
        rows.extend(items);
    }
    rows
}

/// Run the inspect command
pub fn run(
    args: &InspectArgs,
    config: &FeatureConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = super::load(&args.snapshot, config)?;

    // Explicit flags win over the selection stored in the snapshot
    let stored = ActiveFilters::from_state(&state);
    let filters = ActiveFilters {
        room: args.room.or(stored.room),
        role: args.role.or(stored.role),
    };
    let rows: Vec<Row<'_>> = tree(&state, config, &filters)
        .into_iter()
        .filter(|row| !row.hidden)
        .collect();

    match format {
        OutputFormat::Human => {
            let table: Vec<Vec<String>> = rows
                .iter()
                .map(|row| {
                    let (level, name) = match row.parent {
                        None => ("category", cell(row.record.get("name"))),
                        Some(_) => ("item", format!("  {}", cell(row.record.get("name")))),
                    };
                    vec![
                        level.to_owned(),
                        row.record.id().to_string(),
                        row.parent.map(|p| p.to_string()).unwrap_or_else(|| "-".to_owned()),
                        name,
                    ]
                })
                .collect();
            print_table(&["LEVEL", "ID", "PARENT", "NAME"], &table);
            println!();
            println!("Categories:  {}", rows.iter().filter(|r| r.parent.is_none()).count());
            println!("Items:       {}", rows.iter().filter(|r| r.parent.is_some()).count());
        }
        OutputFormat::Json => {
            let entries: Vec<_> = rows
                .iter()
                .map(|row| {
                    json!({
                        "parent": row.parent,
                        "record": row.record,
                    })
                })
                .collect();
            let value = json!({
                "feature": config.name,
                "room": filters.room,
                "role": filters.role,
                "entries": entries,
            });
            println!("{}", serde_json::to_string(&value)?);
        }
    }

    Ok(())
}
