pub mod dir;
pub mod jsonlines;
pub mod doc_parser;

use serde::{Serialize, Deserialize, Deserializer};

/// One normalized corpus entry, as read from a Semantic Scholar JSON record.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub paper_abstract: String,
    #[serde(default, deserialize_with = "nullable")]
    pub authors: Vec<Author>,
    #[serde(default, deserialize_with = "nullable")]
    pub entities: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub fields_of_study: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub sources: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub year: i32,
    #[serde(default, deserialize_with = "nullable")]
    pub venue: String,
    #[serde(default, deserialize_with = "nullable")]
    pub journal_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub out_citations: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub in_citations: Vec<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub ids: Vec<String>,
}

// the corpus writes `null` where a field is unknown
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Document {
    pub fn new(id: &str, title: &str, paper_abstract: &str) -> Self {
        Document {
            id: id.to_string(),
            title: title.to_string(),
            paper_abstract: paper_abstract.to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_from_json() {
        let json = r#"{
            "entities": [], "fieldsOfStudy": ["Physics"], "year": 2015,
            "outCitations": ["2497ed63", "03b31705"],
            "id": "1b2f4e5b",
            "authors": [{"name": "Xiang Fa Liu", "ids": ["153201706"]}, {"name": "Guodong Xia", "ids": null}],
            "journalName": null,
            "paperAbstract": "Experimental investigations on two-phase flow.",
            "inCitations": [],
            "title": "Two-phase flow in helical channels",
            "sources": [], "venue": "", "doi": "10.1016/j.ijmultiphaseflow.2015.03.012"
        }"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.id, "1b2f4e5b");
        assert_eq!(doc.title, "Two-phase flow in helical channels");
        assert_eq!(doc.year, 2015);
        assert_eq!(doc.fields_of_study, vec!["Physics"]);
        assert_eq!(doc.out_citations.len(), 2);
        assert_eq!(doc.journal_name, "");
        assert_eq!(doc.authors[1], Author { name: "Guodong Xia".to_string(), ids: vec![] });
    }

    #[test]
    fn test_missing_fields_default() {
        let doc: Document = serde_json::from_str(r#"{"id": "x", "year": null}"#).unwrap();
        assert_eq!(doc, Document::new("x", "", ""));
    }
}
