mod http_sink_test;
mod pipeline_test;
