pub mod fund_qa;

pub use fund_qa::{AnswerSource, FundQaService, QaAnswer, RETRIEVAL_TOP_K};
