pub mod column;
pub mod grant;
pub mod object;
