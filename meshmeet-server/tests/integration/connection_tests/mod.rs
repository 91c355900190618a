mod test_disconnect_triggers_leave;
mod test_websocket_session;
