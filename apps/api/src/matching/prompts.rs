// Prompt templates for the reasoning stage of job matching.

pub const RERANK_SYSTEM: &str = "You are a compensation analyst mapping job descriptions \
    to a standardized job taxonomy. You judge the substance of the work, the seniority \
    implied, and the scope of responsibility, not surface wording.";

pub const RERANK_PROMPT_TEMPLATE: &str = r#"Map the job below to ONE of the shortlisted taxonomy entries.

JOB:
{job_json}

SHORTLIST (each with precomputed signals):
- similarity: semantic similarity of the job text to the entry (0-1)
- grade_alignment: how well the entry's position class fits the organizational grade (0-1)
- family_match: whether the entry is in the job family the requester hinted
- skills_overlap: fraction of declared skills mentioned by the entry (0-1)

{candidates_json}

Score EVERY shortlisted code with your confidence (0.0-1.0) that it is the correct mapping.
Confidences are independent judgements; they do not need to sum to 1.
If none of the entries describes this job, give every code a confidence below 0.5.

Return JSON exactly in this shape:
{
  "scores": [{"code": "<taxonomy code>", "confidence": 0.0}],
  "justification": "<two sentences explaining the best mapping>"
}"#;
