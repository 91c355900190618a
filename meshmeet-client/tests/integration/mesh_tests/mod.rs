mod test_link_uniqueness;
mod test_room_full;
mod test_two_peers_chat;
