pub mod participants;
pub mod rounds;
pub mod teams;
