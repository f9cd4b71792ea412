pub mod answer;
pub mod grammar;
pub mod loaders;
pub mod question;
pub mod rubric;
pub mod schema;
pub mod scoring;
pub mod submission;

pub use answer::{AnswerAnalysis, AnswerStructure, ConceptFound};
pub use grammar::{GrammarReport, LanguageError, LanguageErrorKind};
pub use loaders::load_submissions;
pub use question::{QuestionAnalysis, QuestionType};
pub use rubric::{Rubric, RubricEntry};
pub use schema::FunctionDeclaration;
pub use scoring::{compute_final_score, ConceptScore, FinalResult, RubricScoring};
pub use submission::Submission;
