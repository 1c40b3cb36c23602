mod helpers;
mod properties_test;
mod scenarios_test;
