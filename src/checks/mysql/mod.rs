pub mod mysql_max_used_connections;
