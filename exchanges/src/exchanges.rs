pub mod strategies;

mod binding;
mod exchange;

pub use binding::Binding;
pub use exchange::Exchange;
pub use strategies::{strategy_for, RoutingStrategy};
