use serde::Serialize;

/// A live application pod that could take over cache-refresh duties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub name: String,
    pub namespace: String,
    /// Pod IP; `None` while the pod has not been assigned one yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Candidate {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, address: Option<&str>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            address: address.map(str::to_string),
        }
    }

    /// Label used in log lines and error targets: `namespace/name`.
    pub fn target_label(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn has_address(&self, address: &str) -> bool {
        self.address.as_deref() == Some(address)
    }
}

/// The candidates observed during one reconciliation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
}

impl CandidateSet {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    pub fn contains_address(&self, address: &str) -> bool {
        self.candidates.iter().any(|c| c.has_address(address))
    }

    /// Candidates in a stable total order by `(name, namespace)`, independent
    /// of the order the platform listed them in.
    pub fn sorted(&self) -> Vec<&Candidate> {
        let mut sorted: Vec<&Candidate> = self.candidates.iter().collect();
        sorted.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.namespace.cmp(&b.namespace))
        });
        sorted
    }

    pub fn addresses(&self) -> Vec<&str> {
        self.candidates
            .iter()
            .filter_map(|c| c.address.as_deref())
            .collect()
    }
}

impl FromIterator<Candidate> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = Candidate>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
