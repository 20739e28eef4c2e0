// Role-play training sessions: a rep converses with a model-played prospect,
// then completes the session to have the conversation scored and earn XP.

pub mod completion;
pub mod handlers;
pub mod prompts;
pub mod xp;
