/*
 * This file is part of ferrokv.
 *
 * ferrokv is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * ferrokv is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with ferrokv. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! ferrokv: an in-memory key-value server speaking a RESP-like text
//! protocol, with AOF and snapshot durability and a fire-and-forget
//! pub/sub router. See `commands::execute` for the dispatcher entry point
//! and `server::Server` for the event loop that drives it.

pub mod commands;
pub mod config;
pub mod error;
pub mod keyspace;
pub mod persistence;
pub mod pubsub;
pub mod resp;
pub mod server;
pub mod util;
