pub mod breakout;
pub mod breakout_environment;
pub mod live_state;
