mod corruption_test;
mod crud_test;
mod expiry_test;
