pub mod customers;
pub mod forecast;
pub mod generate;
pub mod insight;
pub mod overview;
pub mod sales;
pub mod setup;
pub mod ui;
