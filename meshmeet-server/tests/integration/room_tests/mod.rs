mod test_host_closes_room;
mod test_room_full_rejects_third_peer;
