pub mod links;
pub mod markup;
pub mod structured;

/// One founder/person candidate. Either field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonRecord {
    pub name: String,
    pub profile_link: String,
}

impl PersonRecord {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            profile_link: String::new(),
        }
    }

    pub fn link_only(link: &str) -> Self {
        Self {
            name: String::new(),
            profile_link: link.trim().to_string(),
        }
    }

    fn is_blank(&self) -> bool {
        self.name.is_empty() && self.profile_link.is_empty()
    }
}

/// Outcome of a short-circuiting extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Found(Vec<PersonRecord>),
    NotFound,
}

impl Extraction {
    pub fn from_people(people: Vec<PersonRecord>) -> Self {
        if people.is_empty() {
            Extraction::NotFound
        } else {
            Extraction::Found(people)
        }
    }

    pub fn into_people(self) -> Vec<PersonRecord> {
        match self {
            Extraction::Found(people) => people,
            Extraction::NotFound => Vec::new(),
        }
    }
}

/// A fetched detail payload, tagged with the strategy that can read it.
#[derive(Debug, Clone)]
pub enum Detail {
    Structured(serde_json::Value),
    Markup(String),
}
