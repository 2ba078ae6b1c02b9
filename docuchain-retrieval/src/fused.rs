use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info_span, warn, Instrument};

use docuchain_core::{Document, Value};

use crate::{FragmentSearch, KeyValueResolver, RelevanceGrader, RetrievalError, SearchType};

pub const DEFAULT_RETRIEVER_K: usize = 8;
pub const PARENT_DOC_ID_KEY: &str = "doc_id";
pub const FULL_DOC_SUMMARY_ID_KEY: &str = "full_doc_id";
pub const SOURCE_KEY: &str = "source";
pub const SINGLE_TOKEN_LINE: &str = "----------------";

/// Fragments gathered for one source document during a retrieval.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FusedDocumentElements {
    /// Search position of the first fragment in the group.
    pub rank: usize,
    pub summary: String,
    pub fragments: Vec<String>,
    pub source: String,
}

impl FusedDocumentElements {
    /// Renders the group as a single composite text under a separator line.
    pub fn render(&self) -> String {
        let fragments = self
            .fragments
            .iter()
            .map(|fragment| fragment.trim())
            .collect::<Vec<_>>()
            .join("\n\n");
        format!(
            "\n{SINGLE_TOKEN_LINE}\n**** DOCUMENT NAME: {}\n\n**** DOCUMENT SUMMARY:\n{}\n\n**** RELEVANT FRAGMENTS:\n{}\n",
            self.source, self.summary, fragments
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum GroupKey {
    Summary(String),
    Ungrouped,
}

struct Candidate {
    id: String,
    rank: usize,
    content: String,
    parent: Option<String>,
    summary_id: Option<String>,
    summary: Option<String>,
    source: String,
}

impl Candidate {
    fn fragment(&self) -> &str {
        self.parent.as_deref().unwrap_or(&self.content)
    }
}

/// Retrieves fragments and fuses them per source document, prefixing each
/// group with its full-document summary.
pub struct FusedSummaryRetriever {
    search: Arc<dyn FragmentSearch>,
    k: usize,
    search_type: SearchType,
    parent_id_key: String,
    full_doc_summary_id_key: String,
    source_key: String,
    parent_resolver: Option<Arc<dyn KeyValueResolver>>,
    summary_resolver: Option<Arc<dyn KeyValueResolver>>,
    grader: Option<Arc<dyn RelevanceGrader>>,
    concurrent_grading: bool,
}

impl FusedSummaryRetriever {
    pub fn builder<S: FragmentSearch + 'static>(search: S) -> FusedSummaryRetrieverBuilder {
        FusedSummaryRetrieverBuilder::new(search)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn search_type(&self) -> SearchType {
        self.search_type
    }

    /// Metadata key carrying the source label on fused documents.
    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<Document>, RetrievalError> {
        let span = info_span!(
            "fused_summary_retrieve",
            k = self.k,
            search_type = ?self.search_type,
            graded = self.grader.is_some(),
        );
        self.retrieve_fused(query).instrument(span).await
    }

    async fn retrieve_fused(&self, query: &str) -> Result<Vec<Document>, RetrievalError> {
        let found = self.search.search(query, self.search_type, self.k).await?;
        if found.is_empty() {
            debug!("search returned no fragments");
            return Ok(Vec::new());
        }

        let mut candidates = Vec::with_capacity(found.len());
        for (rank, doc) in found.into_iter().enumerate() {
            candidates.push(self.resolve(rank, doc).await?);
        }
        let grades = self.grade_all(query, &candidates).await?;

        let mut index: HashMap<GroupKey, usize> = HashMap::new();
        let mut groups: Vec<(String, FusedDocumentElements)> = Vec::new();
        for (candidate, relevant) in candidates.into_iter().zip(grades) {
            if !relevant {
                debug!(fragment = %candidate.id, "fragment graded irrelevant");
                continue;
            }
            let fragment = candidate.fragment().to_string();
            let key = match candidate.summary_id {
                Some(id) => GroupKey::Summary(id),
                None => GroupKey::Ungrouped,
            };
            match index.get(&key) {
                Some(&position) => groups[position].1.fragments.push(fragment),
                None => {
                    index.insert(key, groups.len());
                    groups.push((
                        candidate.id,
                        FusedDocumentElements {
                            rank: candidate.rank,
                            summary: candidate.summary.unwrap_or_default(),
                            fragments: vec![fragment],
                            source: candidate.source,
                        },
                    ));
                }
            }
        }
        groups.sort_by_key(|(_, elements)| elements.rank);
        debug!(groups = groups.len(), "fragments fused");

        Ok(groups
            .into_iter()
            .map(|(id, elements)| {
                Document::new(id, elements.render())
                    .with_metadata(self.source_key.clone(), elements.source)
            })
            .collect())
    }

    async fn resolve(&self, rank: usize, doc: Document) -> Result<Candidate, RetrievalError> {
        let parent_id = metadata_id(&doc, &self.parent_id_key);
        let summary_id = metadata_id(&doc, &self.full_doc_summary_id_key);

        let parent = match (&parent_id, &self.parent_resolver) {
            (Some(id), Some(resolver)) => non_empty(resolver.resolve(id).await?),
            _ => None,
        };
        let summary = match (&summary_id, &self.summary_resolver) {
            (Some(id), Some(resolver)) => {
                let summary = non_empty(resolver.resolve(id).await?);
                if summary.is_none() {
                    warn!(summary_id = %id, "full document summary not found");
                }
                summary
            }
            _ => None,
        };
        let source = doc
            .metadata_str(&self.source_key)
            .unwrap_or_default()
            .to_string();

        Ok(Candidate {
            id: doc.id,
            rank,
            content: doc.content,
            parent,
            summary_id,
            summary,
            source,
        })
    }

    /// Fragments without a summary are never graded.
    async fn grade_all(
        &self,
        query: &str,
        candidates: &[Candidate],
    ) -> Result<Vec<bool>, RetrievalError> {
        let Some(grader) = &self.grader else {
            return Ok(vec![true; candidates.len()]);
        };

        if self.concurrent_grading {
            return try_join_all(candidates.iter().map(move |candidate| async move {
                match &candidate.summary {
                    Some(summary) => grader.grade(query, summary, &candidate.content).await,
                    None => Ok(true),
                }
            }))
            .await;
        }

        let mut grades = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let relevant = match &candidate.summary {
                Some(summary) => grader.grade(query, summary, &candidate.content).await?,
                None => true,
            };
            grades.push(relevant);
        }
        Ok(grades)
    }
}

fn metadata_id(doc: &Document, key: &str) -> Option<String> {
    match doc.metadata.get(key)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|text| !text.is_empty())
}

pub struct FusedSummaryRetrieverBuilder {
    search: Arc<dyn FragmentSearch>,
    k: usize,
    search_type: SearchType,
    parent_id_key: String,
    full_doc_summary_id_key: String,
    source_key: String,
    parent_resolver: Option<Arc<dyn KeyValueResolver>>,
    summary_resolver: Option<Arc<dyn KeyValueResolver>>,
    grader: Option<Arc<dyn RelevanceGrader>>,
    concurrent_grading: bool,
}

impl FusedSummaryRetrieverBuilder {
    pub fn new<S: FragmentSearch + 'static>(search: S) -> Self {
        Self::from_arc(Arc::new(search))
    }

    pub fn from_arc(search: Arc<dyn FragmentSearch>) -> Self {
        Self {
            search,
            k: DEFAULT_RETRIEVER_K,
            search_type: SearchType::default(),
            parent_id_key: PARENT_DOC_ID_KEY.to_string(),
            full_doc_summary_id_key: FULL_DOC_SUMMARY_ID_KEY.to_string(),
            source_key: SOURCE_KEY.to_string(),
            parent_resolver: None,
            summary_resolver: None,
            grader: None,
            concurrent_grading: false,
        }
    }

    pub fn k(mut self, value: usize) -> Self {
        self.k = value;
        self
    }

    pub fn k_from_env(mut self, var_name: &str) -> Self {
        if let Ok(value) = std::env::var(var_name) {
            match value.trim().parse() {
                Ok(k) => self.k = k,
                Err(_) => warn!(var = var_name, %value, "ignoring non-numeric retriever k"),
            }
        }
        self
    }

    pub fn search_type(mut self, value: SearchType) -> Self {
        self.search_type = value;
        self
    }

    pub fn parent_id_key(mut self, value: impl Into<String>) -> Self {
        self.parent_id_key = value.into();
        self
    }

    pub fn full_doc_summary_id_key(mut self, value: impl Into<String>) -> Self {
        self.full_doc_summary_id_key = value.into();
        self
    }

    pub fn source_key(mut self, value: impl Into<String>) -> Self {
        self.source_key = value.into();
        self
    }

    pub fn parent_resolver<R: KeyValueResolver + 'static>(mut self, resolver: R) -> Self {
        self.parent_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn summary_resolver<R: KeyValueResolver + 'static>(mut self, resolver: R) -> Self {
        self.summary_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn grader<G: RelevanceGrader + 'static>(mut self, grader: G) -> Self {
        self.grader = Some(Arc::new(grader));
        self
    }

    /// Grade all fragments of a retrieval at once instead of one by one.
    pub fn concurrent_grading(mut self, value: bool) -> Self {
        self.concurrent_grading = value;
        self
    }

    pub fn build(self) -> Result<FusedSummaryRetriever, RetrievalError> {
        if self.k == 0 {
            return Err(RetrievalError::Config(
                "k must be greater than 0".to_string(),
            ));
        }
        for (name, key) in [
            ("parent_id_key", &self.parent_id_key),
            ("full_doc_summary_id_key", &self.full_doc_summary_id_key),
            ("source_key", &self.source_key),
        ] {
            if key.trim().is_empty() {
                return Err(RetrievalError::Config(format!("{name} must not be empty")));
            }
        }
        Ok(FusedSummaryRetriever {
            search: self.search,
            k: self.k,
            search_type: self.search_type,
            parent_id_key: self.parent_id_key,
            full_doc_summary_id_key: self.full_doc_summary_id_key,
            source_key: self.source_key,
            parent_resolver: self.parent_resolver,
            summary_resolver: self.summary_resolver,
            grader: self.grader,
            concurrent_grading: self.concurrent_grading,
        })
    }
}
