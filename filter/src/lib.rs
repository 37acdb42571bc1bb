// Copyright (C) 2019-2026 The gossipmap authors.
// This file is part of the gossipmap library.

// The gossipmap library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// The gossipmap library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with the gossipmap library. If not, see <https://www.gnu.org/licenses/>.

//! Address-filtering policy (spec §4.1): bogon/ASN/private-range exclusion
//! and the IPv6 prefix math used for fairness capping (spec §4.3/§4.5).

pub mod asn;
pub mod feed;
pub mod networks;
pub mod policy;

pub use asn::{AsnResolver, MaxMindAsnResolver, NoAsnResolver, SharedAsnResolver};
pub use feed::{HttpPolicyFeed, PolicyFeed, SharedPolicyFeed};
pub use networks::{parse_cidr, parse_network_list, Ipv4Network, Ipv6Network, Network};
pub use policy::{list_included_asns, Filter, PolicyConfig};
