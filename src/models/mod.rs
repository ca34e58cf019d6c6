pub mod lesson;
pub mod question;
pub mod review_session;
pub mod review_state;
pub mod scheduler;

pub use lesson::Lesson;
pub use question::{Answer, Question, QuestionFormat};
pub use review_session::{ReviewItem, ReviewSession};
pub use review_state::{ReviewState, ScheduleParams, ScheduledReview};
pub use scheduler::EasePolicy;
