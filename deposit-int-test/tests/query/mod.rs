mod aggregate_test;
mod query_test;
