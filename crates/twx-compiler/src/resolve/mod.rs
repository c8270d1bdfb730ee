//! Constant, decorator and symbol resolution.

pub mod constant;
pub mod context;
pub mod decorator;
pub mod symbols;

pub use constant::{ConstantResolver, ConstantValue};
pub use context::FileContext;
pub use decorator::{classify_all, ClassifiedDecorator, DecoratorKind};
pub use symbols::SymbolTable;
