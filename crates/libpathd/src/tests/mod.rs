mod path_trigger;
