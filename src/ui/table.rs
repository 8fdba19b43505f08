use tabled::{settings::Style, Table, Tabled};
use crate::content::Record;
use crate::relation::RelationDefinition;
use crate::reverse::Referrer;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

#[derive(Tabled)]
struct DefinitionRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Targets")]
    targets: String,
}

pub fn definitions_table(defs: &[RelationDefinition]) -> String {
    let rows: Vec<DefinitionRow> = defs
        .iter()
        .map(|d| DefinitionRow {
            id: d.internal_id,
            key: d.key.to_string(),
            title: d.title.clone(),
            source: d.source_type.clone(),
            targets: if d.target_types.allows_any() {
                "(any)".to_string()
            } else {
                d.target_types.join(", ")
            },
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Type")]
    record_type: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: String,
}

pub fn records_table(records: &[Record]) -> String {
    let rows: Vec<RecordRow> = records
        .iter()
        .map(|r| RecordRow {
            id: r.id,
            record_type: r.record_type.clone(),
            title: r.title.clone(),
            status: r.status.to_string(),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[derive(Tabled)]
struct ReferrerRow {
    #[tabled(rename = "Record")]
    record_id: i64,
    #[tabled(rename = "Type")]
    record_type: String,
    #[tabled(rename = "Via")]
    meta_key: String,
}

pub fn referrers_table(referrers: &[Referrer]) -> String {
    let rows: Vec<ReferrerRow> = referrers
        .iter()
        .map(|r| ReferrerRow {
            record_id: r.record_id,
            record_type: r.record_type.clone(),
            meta_key: r.meta_key.clone(),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::{RelationKey, TypeList};

    #[test]
    fn test_stats_table_rows() {
        let table = stats_table(&[("Records", "3"), ("Options", "1")]);
        assert!(table.contains("Records"));
        assert!(table.contains("Metric"));
        assert!(TableBuilder::new().build().is_empty());
    }

    #[test]
    fn test_definitions_table_marks_any() {
        let defs = vec![RelationDefinition {
            internal_id: 1,
            key: RelationKey::new("related").unwrap(),
            title: "Related".into(),
            source_type: "article".into(),
            target_types: TypeList::any(),
        }];
        let table = definitions_table(&defs);
        assert!(table.contains("related"));
        assert!(table.contains("(any)"));
    }
}
