//! Bundled example graph.

use crate::error::ConfigError;
use crate::graph_file::GraphFile;

/// Two depth sensors tracked separately, merged, smoothed, and written as JSON lines.
pub const EXAMPLE_GRAPH: &str = r#"name = "two sensors"
description = "Two overlapping sensors tracked, merged, smoothed, and written to stdout"
target_fps = 30.0

[[nodes]]
name = "sensor_a"
type = "cluster_source"

[[nodes]]
name = "sensor_b"
type = "cluster_source"

[[nodes]]
name = "tracker_a"
type = "tracker"
[nodes.params]
search_distance = 0.1
enable_ghosting = true
max_ghost_age = 1.0

[[nodes]]
name = "tracker_b"
type = "tracker"
[nodes.params]
search_distance = 0.1
enable_ghosting = true
max_ghost_age = 1.0

[[nodes]]
name = "merge"
type = "merge_clusters"
[nodes.params]
inputs = 2
merge_distance = 0.3
detach_distance = 0.5

[[nodes]]
name = "smooth"
type = "one_euro"
[nodes.params]
min_cutoff = 1.0
beta = 10.0

[[nodes]]
name = "output"
type = "json_output"

[[connections]]
from = "sensor_a.Clusters"
to = "tracker_a.In"

[[connections]]
from = "sensor_b.Clusters"
to = "tracker_b.In"

[[connections]]
from = "tracker_a.Out"
to = "merge.In 1"

[[connections]]
from = "tracker_b.Out"
to = "merge.In 2"

[[connections]]
from = "merge.Out"
to = "smooth.In"

[[connections]]
from = "smooth.Out"
to = "output.In"
"#;

/// Parses [`EXAMPLE_GRAPH`].
pub fn example_graph() -> Result<GraphFile, ConfigError> {
    GraphFile::from_toml(EXAMPLE_GRAPH)
}
