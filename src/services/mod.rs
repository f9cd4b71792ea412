pub mod answer_scoring;
pub mod answer_understanding;
pub mod final_scoring;
pub mod grammar_evaluation;
pub mod question_understanding;
pub mod result_writer;
pub mod rubric_extraction;
pub mod stage;

pub use answer_scoring::{AnswerScoring, ScoringInput};
pub use answer_understanding::{AnswerInput, AnswerUnderstanding};
pub use final_scoring::{FinalEvaluationReply, FinalScoring, FinalScoringInput};
pub use grammar_evaluation::{GrammarEvaluation, GrammarInput};
pub use question_understanding::{QuestionInput, QuestionUnderstanding};
pub use result_writer::{EvaluationRecord, ResultStore, ResultWriter};
pub use rubric_extraction::{RubricExtraction, RubricInput};
pub use stage::{Stage, StageReply};
