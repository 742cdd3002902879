pub mod bus;
pub mod derive;
pub mod hierarchy;
pub mod index;
pub mod line_edit;
pub mod mutate;
