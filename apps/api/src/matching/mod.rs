// Job matching: free-text job → zero-or-one standardized taxonomy entry.
// Stage 1 shortlists by semantic similarity; stage 2 asks a reasoning service
// to pick one, falling back to the top shortlist entry when it can't.

pub mod matcher;
pub mod prompts;
pub mod reranker;
pub mod similarity;
