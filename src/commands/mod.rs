pub mod search;
pub mod serve;
pub mod similar;
pub mod status;
pub mod stop;
pub mod suggest;
