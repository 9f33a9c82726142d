pub mod const_variable_arr;
pub mod counting_io;
