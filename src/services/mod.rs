// Services module - upstream access layer

pub mod upstream;
