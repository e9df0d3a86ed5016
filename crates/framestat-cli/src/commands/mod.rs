pub mod ask;
pub mod packages;
pub mod run;
pub mod surfaces;
