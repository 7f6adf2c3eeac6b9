pub mod nback;
