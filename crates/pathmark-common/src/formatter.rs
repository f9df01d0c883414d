use crate::grouping::GroupedRecords;
use crate::record::{LocatorRecord, Strategy};

/// Renders the workflow tree the way the management view lists it.
pub fn format_grouped(grouped: &GroupedRecords) -> String {
    if grouped.is_empty() {
        return "No records\n".to_string();
    }

    let mut output = String::new();
    for (workflow, pages) in grouped {
        output.push_str(&format!("{}\n", workflow));
        for (page, sections) in pages {
            let count: usize = sections
                .values()
                .flat_map(|subs| subs.values())
                .map(Vec::len)
                .sum();
            let url = sections
                .values()
                .flat_map(|subs| subs.values())
                .flatten()
                .next()
                .map(|r| r.url.as_str())
                .unwrap_or("No URL");
            output.push_str(&format!("  {} ({} items) {}\n", page, count, url));
            for (section, subsections) in sections {
                output.push_str(&format!("    {}\n", section));
                for (subsection, records) in subsections {
                    output.push_str(&format!("      {}\n", subsection));
                    for record in records {
                        output.push_str(&format_record(record, "        "));
                    }
                }
            }
        }
    }
    output
}

/// e.g. `[id] Username (text) = "bob"` followed by one line per locator.
pub fn format_record(record: &LocatorRecord, indent: &str) -> String {
    let value = if record.metadata.value.is_empty() {
        String::new()
    } else {
        format!(" = {:?}", record.metadata.value)
    };
    let mut output = format!(
        "{}[{}] {} ({}){}\n",
        indent,
        record.id,
        record.display_label(),
        record.metadata.element_type,
        value
    );

    for strategy in Strategy::ALL {
        let locator = record.locators.get(strategy);
        let counter = record.stats.get(strategy);
        output.push_str(&format!(
            "{}  {}: {} (+{} / -{})\n",
            indent,
            strategy,
            if locator.is_empty() { "N/A" } else { locator },
            counter.success_count,
            counter.fail_count
        ));
    }
    output
}
