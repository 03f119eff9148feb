use crate::Component;

/// Human-readable label for an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Name(pub String);

impl Component for Name {
    const NAME: &'static str = "Name";
}

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
