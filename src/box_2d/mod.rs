pub mod rocket_lander;
