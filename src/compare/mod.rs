pub mod equivalence;
pub mod expand;
pub mod normalize;
pub mod subset;
pub mod table;
pub mod value;
