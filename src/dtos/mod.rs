pub mod chatdtos;
pub mod jobdtos;
