mod exporters;
mod layer;
