//! Corpus seeding records and the built-in starter corpus.

use serde::{Deserialize, Serialize};

use super::store::Passage;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedMetadata {
    #[serde(default)]
    pub jurisdiction: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source: String,
}

/// Wire shape used by external collaborators to seed the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRecord {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: SeedMetadata,
}

impl From<SeedRecord> for Passage {
    fn from(record: SeedRecord) -> Self {
        Passage {
            id: record.id,
            text: record.text,
            jurisdiction: record.metadata.jurisdiction,
            title: record.metadata.title,
            source: record.metadata.source,
        }
    }
}

pub fn starter_corpus() -> Vec<Passage> {
    vec![
        Passage::new(
            "doc1",
            "The Constitution of the Federal Republic of Nigeria 1999 (as amended) is the supreme law of the land.",
            "nigeria",
            "Constitution",
            "Statute",
        ),
        Passage::new(
            "doc2",
            "A Non-Disclosure Agreement (NDA) is a legally binding contract that establishes a confidential relationship.",
            "all",
            "NDA Basics",
            "General Law",
        ),
        Passage::new(
            "doc3",
            "In Nigerian labor law, an employer must provide a written contract of employment within 3 months of engagement.",
            "nigeria",
            "Labor Act",
            "Statute",
        ),
        Passage::new(
            "doc4",
            "The Tenancy Law of Lagos State 2011 regulates the relationship between landlords and tenants.",
            "nigeria",
            "Tenancy Law Lagos",
            "Statute",
        ),
        Passage::new(
            "doc5",
            "Burden of proof in civil cases lies with the plaintiff on the preponderance of evidence.",
            "all",
            "Evidence Act",
            "Statute",
        ),
    ]
}
