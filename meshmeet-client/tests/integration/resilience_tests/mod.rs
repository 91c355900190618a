mod test_negotiation_failure;
mod test_reconnect;
mod test_signaling_lost;
