pub mod industry;
pub mod learning;
pub mod pitch;
pub mod skill;
pub mod team;
pub mod training;
pub mod user;
