pub mod field;
pub mod form;
pub mod logic;

pub use field::{Choice, Field, FieldType, FieldWidth};
pub use form::{DEFAULT_MAX_PASSES, EvaluationPolicy, FormPage, FormSpec, PaperSize, PdfConfig};
pub use logic::{Condition, ConditionalLogic, LogicAction, LogicScope, Operator};
