mod test_broadcast_fans_out;
mod test_direct_message_relay;
