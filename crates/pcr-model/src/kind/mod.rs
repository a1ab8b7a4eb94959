mod result_type;
pub use result_type::ResultType;
